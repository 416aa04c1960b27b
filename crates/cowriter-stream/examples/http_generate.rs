use std::sync::Arc;

use cowriter_stream::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), GeneratorError> {
    cowriter_stream::init_observability();

    let generator = Generator::builder()
        .source(Arc::new(HttpEventSource::from_env()?))
        .build()?;

    let request = GenerationRequest::new(
        "Week 3: ownership, borrowing and lifetimes in Rust. Students write a \
         small text-processing tool without cloning input buffers.",
    )
    .configuration(GenerationConfig {
        badge_level: Some("intermediate".into()),
        ..GenerationConfig::default()
    });

    let mut handle = generator.start(request).await?;
    while let Some(card) = handle.next_update().await {
        if let Some(preview) = card.preview() {
            eprintln!("preview: {} bytes", preview.len());
        }
        eprintln!("status: {}", card.status().label());
    }

    let card = handle.finish().await?;
    match (card.data(), card.error()) {
        (Some(suggestion), _) => println!("{}", suggestion.title()),
        (None, Some(error)) => eprintln!("generation failed: {error}"),
        (None, None) => eprintln!("generation cancelled"),
    }
    Ok(())
}
