
use std::error::Error;
use vergen_gitcl::{Emitter, GitclBuilder};

/// This function will emit the git instructions.
/// # Errors
/// * if `git` is not installed
/// * if there is no .git folder, which happens when the source is pulled as a tarball
fn emit_git() -> Result<(), Box<dyn Error>> {
    let gitcl = GitclBuilder::default()
        .all()
        .describe(false, true, Some("ThisPatternShouldNotMatchAnythingEver"))
        .build()?;

    Emitter::default()
        .fail_on_error()
        .add_instructions(&gitcl)?
        .emit()?;
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    if emit_git().is_err() {
        // no git metadata available; allow a user override, otherwise use "unknown"
        let git_desc = option_env!("CUSTOM_VERGEN_GIT_DESCRIBE")
            .unwrap_or("unknown");
        println!("cargo:rustc-env=VERGEN_GIT_DESCRIBE={git_desc}");
    }

    // the emitter tracks the git state; we also need to track the toml and src folder
    println!("cargo:rerun-if-changed=Cargo.toml");
    println!("cargo:rerun-if-changed=src");

    Ok(())
}
