//! Headless demo host: runs the widget runtime against the loopback
//! transport and prints the event stream.

mod config;
mod logging;
mod loopback;

use std::{env, sync::Arc, time::Duration};

use tokio::time::timeout;
use tracing::info;
use widget_core::{SessionState, WidgetCommand, WidgetEvent};
use widget_host::ChannelHostBridge;
use widget_session::{NoSuggestions, RuntimeConfig, SuggestionSource, spawn_runtime};

use config::WidgetConfig;
use loopback::{LoopbackSuggestions, LoopbackTransport};

const DEFAULT_QUERY: &str = "orgId=demo-org&orgUrl=https://chat.example.org&widgetId=demo-widget";
const EVENT_WAIT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    logging::init();

    let query = env::args()
        .nth(1)
        .or_else(|| env::var("WIDGET_EMBED_QUERY").ok())
        .unwrap_or_else(|| DEFAULT_QUERY.to_owned());

    let widget_config = match WidgetConfig::from_query(&query) {
        Ok(widget_config) => widget_config,
        Err(err) => {
            eprintln!("Widget configuration error: {err}");
            std::process::exit(1);
        }
    };
    info!(
        org_id = %widget_config.org_id,
        org_url = %widget_config.org_url,
        widget_id = %widget_config.widget_id,
        channel_id = %widget_config.channel_id,
        company = ?widget_config.company,
        header_icon = ?widget_config.header_icon,
        pau_url = ?widget_config.pau_url,
        agents_url = ?widget_config.agents_url,
        "starting embed demo"
    );

    // Follow-up chips only come into play when a webhook is configured.
    let suggestions: Arc<dyn SuggestionSource> = if widget_config.pau_url.is_some() {
        Arc::new(LoopbackSuggestions)
    } else {
        Arc::new(NoSuggestions)
    };

    let (bridge, mut host_rx) = ChannelHostBridge::new(8);
    let handle = spawn_runtime(
        Arc::new(LoopbackTransport::new()),
        Arc::new(bridge),
        suggestions,
        RuntimeConfig::default(),
    );
    let mut events = handle.subscribe();

    tokio::spawn(async move {
        while let Some(signal) = host_rx.recv().await {
            println!("host <- {signal:?}");
        }
    });

    // Auto-connect kicks the session off; send one message once connected,
    // then end and wait for the runtime to come back to idle.
    let mut sent = false;
    loop {
        let event = match timeout(EVENT_WAIT, events.recv()).await {
            Ok(Ok(event)) => event,
            Ok(Err(_)) | Err(_) => break,
        };
        println!("event: {event:?}");

        match &event {
            WidgetEvent::StateChanged {
                state: SessionState::Connected,
            } if !sent => {
                sent = true;
                if handle
                    .send(WidgetCommand::SendText {
                        text: "Hello from the embed demo".to_owned(),
                    })
                    .await
                    .is_err()
                {
                    break;
                }
            }
            WidgetEvent::MessageUpserted { message } if message.text.starts_with("You said:") => {
                if handle.send(WidgetCommand::End).await.is_err() {
                    break;
                }
            }
            WidgetEvent::StateChanged {
                state: SessionState::Idle,
            } => break,
            _ => {}
        }
    }

    info!("embed demo finished");
}
