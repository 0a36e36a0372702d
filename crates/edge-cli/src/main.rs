fn main() {
    edge_cli::run_main();
}
