//! Error handling foundation for the job board.
//!
//! Only the `Result` alias lives here. Each crate defines its own error
//! enums next to the code that raises them and wraps infrastructure failures
//! in a rootcause `Report`.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
