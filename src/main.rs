fn main() {
    if let Err(err) = gacha_sim::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
