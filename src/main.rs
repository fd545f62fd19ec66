fn main() {
    if let Err(e) = clinicore::run() {
        tracing::error!("{e}");
        eprintln!("clinicore: {e}");
        std::process::exit(1);
    }
}
