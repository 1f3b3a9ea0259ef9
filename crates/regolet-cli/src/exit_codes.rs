//! Exit codes for the `regolet` binary.
//! Load failures from `fetch` use `LoadError::exit_code` (10..=17) instead.

pub const SUCCESS: i32 = 0;
pub const EVAL_FAILED: i32 = 1; // Policy could not be loaded or evaluated
pub const CONFIG_ERROR: i32 = 2; // Bad arguments, environment or input

#[cfg(test)]
mod tests {
    use regolet_loader::LoadError;

    use super::*;

    #[test]
    fn test_load_error_codes_do_not_collide() {
        let own = [SUCCESS, EVAL_FAILED, CONFIG_ERROR];
        for err in [
            LoadError::InvalidName { name: "".into(), reason: "empty".into() },
            LoadError::Config { message: "bad".into() },
            LoadError::NotFound { name: "gone".into() },
        ] {
            assert!(!own.contains(&err.exit_code()), "{:?}", err);
        }
    }
}
