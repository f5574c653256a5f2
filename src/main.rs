fn main() {
    if let Err(err) = csv_insight::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
