fn main() {
    // prevent linking for docs.rs
    #[cfg(not(feature = "docsrs"))]
    {
        println!("cargo:rerun-if-env-changed=OPENNI_LIB_DIR");

        // OpenNI 1.x installs to /usr/lib by default, otherwise point OPENNI_LIB_DIR at it
        if let Ok(dir) = std::env::var("OPENNI_LIB_DIR") {
            println!("cargo:rustc-link-search=native={dir}");

            // necessary for runtime to find the shared library
            println!("cargo:rustc-link-arg=-Wl,-rpath,{dir}");
        }

        println!("cargo:rustc-link-lib=OpenNI");
    }
}
