use crate::cli::RunContext;
use crate::error::Result;
use crate::select::{prompt, NarrowingEngine, Selection};

pub async fn execute(ctx: &mut RunContext, tags: Option<String>) -> Result<()> {
    let engine = NarrowingEngine::from_catalog(ctx.catalog(false).await?);

    let selection = match tags {
        Some(tags) => engine.resolve(&tags.replace(',', " "))?,
        None => prompt::run(&engine)?,
    };

    match selection {
        Selection::Role(arn) => println!("{}", arn),
        Selection::Cancelled => tracing::info!("Selection cancelled"),
    }
    Ok(())
}
