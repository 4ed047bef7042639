use std::io;

use tracing::warn;

/// Loads variables from a `.env` file in the working directory or one of its
/// parents. A missing file is not an error.
pub fn load_dotenvy_vars_if_present() {
    match dotenvy::dotenv() {
        Ok(_) => {}
        Err(dotenvy::Error::Io(e)) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("failed to load .env file: {e}"),
    }
}
