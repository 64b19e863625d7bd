//! # bookshelf CLI
//!
//! Command-line interface for the bookshelf catalog.
//!
//! ## Usage
//! ```bash
//! bookshelf scan ~/Books --exclude ~/Books/tmp
//! bookshelf list --private --output json
//! ```

mod cli;

use bookshelf_catalog::Result;

fn main() -> Result<()> {
    bookshelf_catalog::init_tracing();
    cli::run()
}
