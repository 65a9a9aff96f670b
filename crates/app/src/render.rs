use biochat_core::{Answer, AnswerOutcome, ConversationSession, IndexManifest, InitReport, PipelineError};

pub fn report(report: &InitReport) {
    if report.reused_index {
        println!("knowledge base loaded: {} entries", report.entries);
        if let Some(model) = &report.stale_embedding_model {
            println!("  warning: index was embedded with {model}; run `biochat rebuild` to re-embed");
        }
        return;
    }

    println!(
        "knowledge base built: {} documents, {} chunks, {} entries in {:.1}s",
        report.documents,
        report.chunks,
        report.entries,
        report.elapsed.as_secs_f64()
    );
    for skipped in &report.skipped_files {
        println!("  skipped {}: {}", skipped.path.display(), skipped.reason);
    }
}

pub fn answer(answer: &Answer) {
    println!("{}", answer.text);
    match &answer.outcome {
        AnswerOutcome::Answered | AnswerOutcome::NoContext => {}
        AnswerOutcome::RetrievalFailed(reason) => eprintln!("(retrieval failed: {reason})"),
        AnswerOutcome::GenerationFailed(reason) => eprintln!("(generation failed: {reason})"),
    }
}

pub fn error(error: &PipelineError) {
    eprintln!("error: {error}");
    if error.is_configuration() {
        eprintln!("fix the configuration above and run the command again");
    }
}

pub fn history(session: &ConversationSession) {
    if session.messages().is_empty() {
        println!("(no messages yet)");
    }
    for message in session.messages() {
        println!("{}: {}", message.role, message.content);
    }
}

pub fn manifest(manifest: Option<&IndexManifest>) {
    let Some(manifest) = manifest else {
        println!("knowledge base is not initialized");
        return;
    };

    println!("entries:         {}", manifest.entry_count);
    println!("dimensions:      {}", manifest.dimensions);
    println!("metric:          {}", manifest.metric);
    println!("embedding model: {}", manifest.embedding_model);
    println!(
        "chunking:        size {} overlap {}",
        manifest.chunking.chunk_size, manifest.chunking.chunk_overlap
    );
    println!("built at:        {}", manifest.built_at.to_rfc3339());
}
