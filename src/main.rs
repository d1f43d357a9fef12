fn main() {
    if let Err(err) = sales_ingest::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
