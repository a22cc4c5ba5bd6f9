fn main() {
    // Embed storefront migrations; rebuild when they change.
    println!("cargo:rerun-if-changed=../storefront/migrations");
}
