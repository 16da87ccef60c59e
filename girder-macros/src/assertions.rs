//! Assertion macros
//!
//! This module contains macros for performing assertions. Notable macros defined in this module
//! are:
//!
//! - [`assert_ok!`]
//! - [`assert_err!`]
//! - [`assert_some!`]
//! - [`assert_none!`]
//! - [`assert_matches!`]

/// Assert that a `Result` is `Ok`, returning the value inside the `Ok` variant.
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {{
        match $expr {
            ::std::result::Result::Ok(val) => val,
            ::std::result::Result::Err(err) => {
                panic!("assertion failed: Err({:?})", err);
            }
        }
    }};
}

/// Assert that a `Result` is `Err`, returning the error inside the `Err` variant.
#[macro_export]
macro_rules! assert_err {
    ($expr:expr) => {{
        match $expr {
            ::std::result::Result::Ok(val) => {
                panic!("assertion failed: Ok({:?})", val);
            }
            ::std::result::Result::Err(err) => err,
        }
    }};
}

/// Assert that an `Option` is `Some`, returning the value inside the `Some` variant.
#[macro_export]
macro_rules! assert_some {
    ($expr:expr) => {{
        match $expr {
            ::std::option::Option::Some(val) => val,
            ::std::option::Option::None => {
                panic!("assertion failed: None");
            }
        }
    }};
}

/// Assert that an `Option` is `None`.
#[macro_export]
macro_rules! assert_none {
    ($expr:expr) => {{
        if let ::std::option::Option::Some(val) = $expr {
            panic!("assertion failed: Some({:?})", val);
        };
    }};
}

/// Assert that an expression matches a pattern, returning the arm's output.
#[macro_export]
macro_rules! assert_matches {
    ($expr:expr, $pat:pat_param => $output:expr) => {{
        match $expr {
            $pat => $output,
            ref unmatched => {
                panic!(
                    "assertion failed: {:?} does not match {}",
                    unmatched,
                    stringify!($pat)
                );
            }
        }
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_std_result_assertions() {
        let result: Result<i32, &str> = Ok(42);
        assert_eq!(assert_ok!(result), 42);
        let result: Result<i32, &str> = Err("error");
        assert_eq!(assert_err!(result), "error");
    }

    #[test]
    fn test_std_option_assertions() {
        let option: Option<i32> = Some(42);
        assert_eq!(assert_some!(option), 42);
        let option: Option<i32> = None;
        assert_none!(option);
    }

    #[test]
    #[should_panic]
    fn test_assert_ok_panics_on_err() {
        let result: Result<i32, &str> = Err("error");
        assert_ok!(result);
    }

    #[test]
    #[should_panic]
    fn test_assert_some_panics_on_none() {
        let option: Option<i32> = None;
        assert_some!(option);
    }

    #[test]
    fn test_assert_matches_returns_binding() {
        let option = Some(3);
        let inner = assert_matches!(option, Some(v) => v);
        assert_eq!(inner, 3);
    }

    #[test]
    #[should_panic]
    fn test_assert_matches_panics_on_mismatch() {
        let option: Option<i32> = None;
        assert_matches!(option, Some(v) => v);
    }
}
