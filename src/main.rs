fn main() {
    sketchy::cli::run();
}
