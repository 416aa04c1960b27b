use std::sync::Arc;

use cowriter_stream::prelude::*;

const RECORDING: &str = concat!(
    "data: {\"type\":\"progress\",\"progress\":25}\n",
    "data: {\"type\":\"token\",\"content\":\"{\\\"title\\\": \\\"Ownership\",\"accumulated\":\"{\\\"title\\\": \\\"Ownership\",\"done\":false}\n",
    "data: {\"type\":\"token\",\"content\":\" Basics\\\"}\",\"accumulated\":\"{\\\"title\\\": \\\"Ownership Basics\\\"}\",\"done\":true}\n",
    "data: [DONE]\n",
);

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), GeneratorError> {
    let generator = Generator::builder()
        .source(Arc::new(RecordedSource::chunked(RECORDING, 16)))
        .build()?;

    let card = generator
        .start(GenerationRequest::new("Ownership basics"))
        .await?
        .finish()
        .await?;
    let view = serde_json::to_string_pretty(&card.view())
        .map_err(|e| GeneratorError::Protocol(format!("failed to render card: {e}")))?;
    println!("{view}");
    Ok(())
}
