//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

fn main() {
    if let Err(err) = handover_cli::run() {
        #[expect(clippy::print_stderr, reason = "the binary reports fatal errors on stderr")]
        {
            eprintln!("handover: {err}");
        }
        std::process::exit(1);
    }
}
