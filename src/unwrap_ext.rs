use std::fmt::Display;

use log::error;

/// Logs the error and terminates the process with exit code 1.
pub trait OrExit {
    type Output;
    fn or_exit(self, msg: &str) -> Self::Output;
}

impl<T, E> OrExit for Result<T, E>
where
    E: Display,
{
    type Output = T;
    fn or_exit(self, msg: &str) -> Self::Output {
        match self {
            Err(e) => {
                error!("{msg}: {e}");
                std::process::exit(1);
            }
            Ok(v) => v,
        }
    }
}
