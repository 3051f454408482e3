use serde_json::json;
use tavern::prelude::*;

// ---------------------------------------------------------------------------
// Identity provider
// ---------------------------------------------------------------------------

/// Accepts `"<id>:<name>"` credentials. Development only.
struct NameTagProvider;

impl IdentityProvider for NameTagProvider {
    async fn verify(&self, credential: &str) -> Result<VerifiedIdentity, ProfileError> {
        let (id, name) = credential
            .split_once(':')
            .ok_or_else(|| ProfileError::AuthFailed("expected <id>:<name>".into()))?;
        let id = id
            .parse()
            .map_err(|_| ProfileError::AuthFailed("id must be a number".into()))?;
        Ok(VerifiedIdentity::new(IdentityId(id)).with_display_name(name))
    }
}

// ---------------------------------------------------------------------------
// Script
// ---------------------------------------------------------------------------

async fn play(tavern: &Tavern<NameTagProvider>) -> Result<(), TavernError> {
    let gm = tavern.authenticate("1:Morgan").await?;
    let rook = tavern.authenticate("2:Rook").await?;
    let wren = tavern.authenticate("3:Wren").await?;
    let latecomer = tavern.authenticate("4:Pip").await?;

    let session = tavern
        .create_session(
            &gm,
            NewSession::new()
                .title("The Sunken Crypt")
                .description("A one-shot for two")
                .max_players(2),
        )
        .await?;
    println!("created {} ({})", session.title, session.token);

    tavern.join(&rook, session.id).await?;
    tavern.join(&wren, session.id).await?;
    if let Err(e) = tavern.join(&latecomer, session.id).await {
        println!("Pip could not join: {e}");
    }

    let state = tavern
        .update_game_state(
            &gm,
            session.id,
            GameStatePatch::new()
                .scene("Flooded antechamber")
                .set("torches", json!(2))
                .set("party_hp", json!({"rook": 12, "wren": 9})),
        )
        .await?;
    tavern
        .post_message(
            &gm,
            session.id,
            "Water laps at your boots. Something glints below the surface.",
            MessageRole::Model,
        )
        .await?;

    tavern
        .post_message(&rook, session.id, "I wade in and feel around.", MessageRole::User)
        .await?;
    tavern
        .roll(
            &rook,
            session.id,
            RollRequest::new(DiceType::D20).skill("Perception").modifier(2),
        )
        .await?;
    tavern
        .roll(
            &wren,
            session.id,
            RollRequest::new(DiceType::D6).count(2).skill("Damage"),
        )
        .await?;

    // A stale write loses to the one before it.
    tavern
        .update_game_state(
            &gm,
            session.id,
            GameStatePatch::new()
                .action("Rook found a silver key")
                .expect_version(state.version),
        )
        .await?;
    if let Err(e) = tavern
        .update_game_state(
            &gm,
            session.id,
            GameStatePatch::new()
                .set("torches", json!(1))
                .expect_version(state.version),
        )
        .await
    {
        println!("stale write rejected: {e} ({})", e.kind());
    }

    if let Err(e) = tavern
        .list_messages(&latecomer, session.id, MessageFilter::default())
        .await
    {
        println!("Pip cannot read the log: {e}");
    }

    tavern
        .update_status(&gm, session.id, SessionStatus::Completed)
        .await?;

    println!("--- log ---");
    let log = tavern
        .list_messages(&wren, session.id, MessageFilter::default())
        .await?;
    for message in &log.items {
        let who = match message.author {
            Some(id) => tavern.get_profile(&wren, id).await?.display_name,
            None => "*".to_string(),
        };
        println!("[{}] {who}: {}", message.role, message.content);
    }

    let stats = tavern.session_stats(&gm, session.id).await?;
    println!(
        "--- {} messages, {} rolls, {} players ---",
        stats.message_count, stats.dice_roll_count, stats.participant_count
    );

    let transcript = tavern
        .export_messages(&wren, session.id, ExportFormat::Csv)
        .await?;
    println!("--- csv export: {} bytes ---", transcript.len());

        tavern.delete_session(&gm, session.id).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tavern::telemetry::init();

    let tavern = Tavern::<NameTagProvider>::builder().build(NameTagProvider)?;
    if let Err(e) = play(&tavern).await {
        tracing::error!(error = %e, kind = %e.kind(), "session script failed");
        return Err(e.into());
    }
    Ok(())
}
