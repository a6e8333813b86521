fn main() {
    if let Err(err) = auditdash_lib::run() {
        eprintln!("auditdash: {}", err);
        std::process::exit(1);
    }
}
