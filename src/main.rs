fn main() {
    if handle_cli_flags() {
        return;
    }

    if let Err(err) = refined_hn::run() {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

fn handle_cli_flags() -> bool {
    let mut saw_flag = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("refined-hn {}", refined_hn::VERSION);
                saw_flag = true;
            }
            "--help" | "-h" => {
                println!("{}", refined_hn::app::usage());
                saw_flag = true;
            }
            _ => {}
        }
    }
    saw_flag
}
