use std::env;

fn main() {
    println!("cargo:rerun-if-env-changed=TIDY_LIB_DIR");
    println!("cargo:rerun-if-env-changed=TIDY_STATIC");

    if let Ok(dir) = env::var("TIDY_LIB_DIR") {
        println!("cargo:rustc-link-search=native={}", dir);
    }

    let kind = match env::var("TIDY_STATIC") {
        Ok(v) if v != "0" => "static",
        _ => "dylib",
    };
    println!("cargo:rustc-link-lib={}=tidy", kind);
}
