fn main() {
    vaxtrack_lib::run()
}
