use reprise::RepriseError;

fn main() {
    if let Err(e) = reprise::cli::run() {
        match e {
            RepriseError::Expected(e) => eprintln!("{e}"),
            e => eprintln!("Error: {e}"),
        }
        std::process::exit(1);
    }
}
