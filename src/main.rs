use sshm::cli::main_func;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // one operation per invocation, the only async work is the Netbox fetch
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(main_func())
}
