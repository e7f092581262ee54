use chrono::Duration;
use taskkeeper_bot::utils::validation::*;

#[cfg(test)]
mod validation_tests {
    use super::*;

    #[test]
    fn test_parse_identity() {
        assert_eq!(parse_identity("42").unwrap(), 42);
        assert_eq!(parse_identity("  123456789 ").unwrap(), 123456789);

        for invalid in ["", "abc", "0", "-5", "4.2"] {
            assert!(parse_identity(invalid).is_err(), "Should reject identity: {}", invalid);
        }
    }

    #[test]
    fn test_parse_task_id() {
        assert_eq!(parse_task_id("7").unwrap(), 7);
        assert_eq!(parse_task_id("#12").unwrap(), 12);
        assert!(parse_task_id("").is_err());
        assert!(parse_task_id("seven").is_err());
        assert!(parse_task_id("-1").is_err());
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::seconds(30));
        assert_eq!(parse_duration("15m").unwrap(), Duration::minutes(15));
        assert_eq!(parse_duration("12h").unwrap(), Duration::hours(12));
        assert_eq!(parse_duration("7D").unwrap(), Duration::days(7));
        assert_eq!(parse_duration("2w").unwrap(), Duration::weeks(2));
    }

    #[test]
    fn test_parse_duration_rejects_bad_input() {
        for invalid in ["", "h", "0h", "-3h", "10y", "abc", "366d", "1.5h", "5ñ"] {
            assert!(parse_duration(invalid).is_err(), "Should reject duration: {}", invalid);
        }
        assert!(parse_duration("365d").is_ok());
    }

    #[test]
    fn test_validate_reason_length() {
        assert_eq!(validate_reason("  spam  ").unwrap(), "spam");
        assert!(validate_reason(&"a".repeat(MAX_REASON_LENGTH)).is_ok());
        assert!(validate_reason(&"a".repeat(MAX_REASON_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_validate_task_text() {
        assert_eq!(validate_task_text(" Buy milk ").unwrap(), "Buy milk");
        assert!(validate_task_text("   ").is_err());
        assert!(validate_task_text(&"é".repeat(MAX_TASK_TEXT_LENGTH)).is_ok());
        assert!(validate_task_text(&"é".repeat(MAX_TASK_TEXT_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_parse_target_args() {
        let args = parse_target_args("42 repeated spam").unwrap();
        assert_eq!(args.target, Some(42));
        assert_eq!(args.rest, "repeated spam");

        // Reply form: no ID, everything is text
        let args = parse_target_args("repeated spam").unwrap();
        assert_eq!(args.target, None);
        assert_eq!(args.rest, "repeated spam");

        let args = parse_target_args("").unwrap();
        assert_eq!(args.target, None);
        assert_eq!(args.rest, "");

        assert!(parse_target_args("-42 spam").is_err());
    }

    #[test]
    fn test_parse_ban_args_full() {
        let args = parse_ban_args("42 7d --purge posting links").unwrap();
        assert_eq!(args.target, Some(42));
        assert_eq!(args.duration, Some(Duration::days(7)));
        assert!(args.purge);
        assert_eq!(args.reason, "posting links");
    }

    #[test]
    fn test_parse_ban_args_permanent_without_reason() {
        let args = parse_ban_args("42").unwrap();
        assert_eq!(args.target, Some(42));
        assert_eq!(args.duration, None);
        assert!(!args.purge);
        assert_eq!(args.reason, "");
    }

    #[test]
    fn test_parse_ban_args_reply_form() {
        let args = parse_ban_args("12h flooding --purge").unwrap();
        assert_eq!(args.target, None);
        assert_eq!(args.duration, Some(Duration::hours(12)));
        assert!(args.purge);
        assert_eq!(args.reason, "flooding");
    }

    #[test]
    fn test_parse_ban_args_duration_only_after_target() {
        // A duration-looking word later in the reason stays part of the reason
        let args = parse_ban_args("42 spam for 3d straight").unwrap();
        assert_eq!(args.duration, None);
        assert_eq!(args.reason, "spam for 3d straight");
    }

    #[test]
    fn test_parse_ban_args_rejects_oversized_duration() {
        assert!(parse_ban_args("42 400d").is_err());
    }
}

#[cfg(test)]
mod task_edit_tests {
    use super::*;
    use taskkeeper_bot::storage::models::Priority;

    #[test]
    fn test_parse_task_edit() {
        assert_eq!(parse_task_edit("#3 Home chores").unwrap(), (3, "Home chores".to_string()));
        assert_eq!(parse_task_edit("3").unwrap(), (3, String::new()));
        assert!(parse_task_edit("").is_err());
        assert!(parse_task_edit("home 3").is_err());
    }

    #[test]
    fn test_parse_priority() {
        assert_eq!(parse_priority("HIGH").unwrap(), Priority::High);
        assert_eq!(parse_priority(" low ").unwrap(), Priority::Low);
        let error = parse_priority("urgent").unwrap_err().to_string();
        assert!(error.contains("use high, medium or low"));
    }

    #[test]
    fn test_validate_category() {
        assert_eq!(validate_category("  Work ").unwrap(), "Work");
        assert!(validate_category("").is_err());
        assert!(validate_category(&"c".repeat(MAX_CATEGORY_LENGTH + 1)).is_err());
    }
}
