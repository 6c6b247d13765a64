//! Cron macro expansion.
//!
//! `@daily` and friends resolve to a concrete five-field expression with
//! randomized minute/hour/day fields, so that many repositories using the
//! same recipe do not all fire at the same instant.

use rand::Rng;

const DAYS_OF_WEEK: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];
const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

pub const MACROS: [&str; 7] = [
    "@hourly",
    "@daily",
    "@weekly",
    "@weekdays",
    "@weekends",
    "@monthly",
    "@yearly",
];

pub fn is_macro(expr: &str) -> bool {
    MACROS.contains(&expr)
}

/// Resolve `expr` if it is a macro, otherwise return it unchanged.
pub fn resolve<R: Rng + ?Sized>(expr: &str, rng: &mut R) -> String {
    let minute = rng.gen_range(0..60);
    let hour = rng.gen_range(0..24);
    match expr {
        "@hourly" => format!("{minute} * * * *"),
        "@daily" => format!("{minute} {hour} * * *"),
        "@weekly" => {
            let dow = DAYS_OF_WEEK[rng.gen_range(0..DAYS_OF_WEEK.len())];
            format!("{minute} {hour} * * {dow}")
        }
        "@weekdays" => format!("{minute} {hour} * * 1-5"),
        "@weekends" => format!("{minute} {hour} * * sat,sun"),
        "@monthly" => {
            let day = rng.gen_range(1..=28);
            format!("{minute} {hour} {day} * *")
        }
        "@yearly" => {
            let day = rng.gen_range(1..=28);
            let month = MONTHS[rng.gen_range(0..MONTHS.len())];
            format!("{minute} {hour} {day} {month} *")
        }
        other => other.to_string(),
    }
}

/// Minimal shape check: five whitespace-separated fields, or a macro.
pub fn validate(expr: &str) -> Result<(), String> {
    let expr = expr.trim();
    if is_macro(expr) {
        return Ok(());
    }
    if expr.starts_with('@') {
        return Err(format!("unknown cron macro '{}'", expr));
    }
    let fields = expr.split_whitespace().count();
    if fields != 5 {
        return Err(format!(
            "cron expression '{}' has {} fields, expected 5",
            expr, fields
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn fields(expr: &str) -> Vec<String> {
        expr.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn test_resolve_with_zero_rng() {
        let mut rng = StepRng::new(0, 0);
        assert_eq!(resolve("@hourly", &mut rng), "0 * * * *");
        assert_eq!(resolve("@daily", &mut rng), "0 0 * * *");
        assert_eq!(resolve("@weekly", &mut rng), "0 0 * * sun");
        assert_eq!(resolve("@weekdays", &mut rng), "0 0 * * 1-5");
        assert_eq!(resolve("@weekends", &mut rng), "0 0 * * sat,sun");
        assert_eq!(resolve("@monthly", &mut rng), "0 0 1 * *");
        assert_eq!(resolve("@yearly", &mut rng), "0 0 1 jan *");
    }

    #[test]
    fn test_resolve_passthrough() {
        let mut rng = StepRng::new(0, 0);
        assert_eq!(resolve("0 18 * * *", &mut rng), "0 18 * * *");
    }

    #[test]
    fn test_resolved_fields_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let f = fields(&resolve("@yearly", &mut rng));
            assert_eq!(f.len(), 5);
            let minute: u32 = f[0].parse().unwrap();
            let hour: u32 = f[1].parse().unwrap();
            let day: u32 = f[2].parse().unwrap();
            assert!(minute < 60);
            assert!(hour < 24);
            assert!((1..=28).contains(&day));
            assert!(MONTHS.contains(&f[3].as_str()));
            assert_eq!(f[4], "*");
        }
    }

    #[test]
    fn test_validate() {
        assert!(validate("@weekly").is_ok());
        assert!(validate("*/15 * * * *").is_ok());
        assert!(validate("@fortnightly").is_err());
        assert!(validate("0 0 * *").is_err());
    }
}
