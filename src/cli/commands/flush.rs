use crate::cli::RunContext;
use crate::error::Result;

pub fn execute(ctx: &mut RunContext) -> Result<()> {
    let removed = ctx.flush()?;
    eprintln!("Flushed {} cached role credentials", removed);
    Ok(())
}
