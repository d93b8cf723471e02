//! Segmentation benchmark CLI
//!
//! Evaluates an exported segmentation model on a labelled dataset using the
//! segeval library.

#[cfg(feature = "cli")]
use segeval::cli;

#[cfg(feature = "cli")]
fn main() -> anyhow::Result<()> {
    cli::main()
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}
