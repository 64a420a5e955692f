fn main() {
    if let Err(err) = session_analytics::app::run() {
        eprintln!("api startup failed: {err}");
        std::process::exit(1);
    }
}
