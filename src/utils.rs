use std::io::Write;

use serde_json::Value;

use crate::schema::SchemaRequest;
use crate::service::{SchemaError, SchemaService};

#[derive(Debug, thiserror::Error)]
pub enum OneOffError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Error writing the result: {0}")]
    Output(#[from] std::io::Error),

    #[error("Error serializing the result: {0}")]
    Serialization(#[from] serde_json::Error),
}

// Run a single request without credential checks and write its JSON result
// followed by a newline
pub async fn run_one_off_command<W>(
    service: &SchemaService,
    request: &str,
    mut output: W,
) -> Result<(), OneOffError>
where
    W: Write,
{
    let request = SchemaRequest::from_slice(request.as_bytes()).map_err(SchemaError::from)?;
    let response = service.handle(request).await?;

    let value: Value = serde_json::to_value(response)?;
    serde_json::to_writer(&mut output, &value)?;
    writeln!(output)?;
    Ok(())
}
