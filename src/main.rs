use jukebox::commands::Dispatcher;
use jukebox::config::Config;
use jukebox::gateway::{Inbound, MessageResponder};
use jukebox::player::{source::YtDlp, Player};
use jukebox::{Data, Error};
use poise::serenity_prelude as serenity;
use songbird::serenity::SerenityInit;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;
    let discord_token = config.discord_token.clone();
    info!("Loaded configuration: {:?}", config);

    // Commands are only dispatched once the extractor is known to work
    let source = YtDlp::new(config.ytdlp_path.clone());
    let version = source.version().await?;
    info!("Extractors are loaded! (yt-dlp {})", version);

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, _framework| {
            Box::pin(async move {
                info!("{} is ready!", ready.user.tag());

                // Set bot status
                ctx.set_activity(Some(serenity::ActivityData::custom(&config.status_message)));

                let manager = songbird::get(ctx)
                    .await
                    .ok_or("Songbird Voice client not initialized")?;
                let player = Player::new(manager, ctx.http.clone(), reqwest::Client::new(), source);
                let dispatcher = Dispatcher::new(
                    Arc::new(player),
                    config.command_prefix.clone(),
                    config.playback(),
                );

                Ok(Data { config, dispatcher })
            })
        })
        .build();

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::GUILD_VOICE_STATES;

    let mut client = serenity::ClientBuilder::new(&discord_token, intents)
        .framework(framework)
        .register_songbird()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create client: {}", e))?;

    info!("Starting bot...");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}

async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    if let serenity::FullEvent::Message { new_message } = event {
        let inbound = Inbound::from_message(ctx, new_message);
        let responder = MessageResponder::new(ctx, new_message, framework.shard_manager().clone());

        // One failed reply must not take the handler down
        if let Err(e) = data.dispatcher.handle(&inbound, &responder).await {
            error!(
                "Failed to handle message {} in channel {}: {}",
                new_message.id, new_message.channel_id, e
            );
        }
    }
    Ok(())
}
