/// Expose build metadata as environment variables at compile time.
///
/// The `update` module uses `env!("TARGET")` for diagnostics, and release
/// pipelines set `MINLY_RELEASE_VERSION` so that only tagged builds carry a
/// semantic version. Everything else is a development build.
fn main() {
    println!(
        "cargo:rustc-env=TARGET={}",
        std::env::var("TARGET").unwrap()
    );
    println!("cargo:rerun-if-env-changed=MINLY_RELEASE_VERSION");
    println!("cargo:rerun-if-env-changed=MINLY_GIT_SHA");
    println!("cargo:rerun-if-env-changed=MINLY_BUILD_DATE");
}
