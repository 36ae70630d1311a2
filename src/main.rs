fn main() {
    if let Err(err) = flowscribe::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
