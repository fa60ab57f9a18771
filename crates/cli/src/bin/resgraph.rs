use anyhow::Result;

fn main() -> Result<()> {
    resgraph_cli::main_entry()
}
