//! Process entrypoint for the two runtime roles described in spec
//! §4.2.1/§4.3: `--role scheduler` runs the schedule-drain and
//! control-plane event loop; `--role worker` runs the trigger stream
//! consumer that drives DAG executions. Both share one binary so a
//! deployment can scale each role independently by process count.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use core_integrations::{
    AesGcmCredentialDecryptor, ControlPlaneSubscriber, ReqwestWebhookHandler,
};
use core_node_engine::{ActionRegistry, GraphExecutor, PgWorkflowRepository, Services};
use core_scheduler::{
    Config, RedisScheduleStore, RedisTriggerStream, SchedulerRunner, SchedulerTriggerHandler,
    TriggerHandlerRegistry, TriggerWorker, WebhookBotTriggerHandler, DEFAULT_IDLE_THRESHOLD,
    DEFAULT_RECLAIM_INTERVAL, DEFAULT_TICK_INTERVAL,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jobs_runner=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let role = parse_role()?;
    let config = Config::from_env()?;

    match role {
        Role::Scheduler => run_scheduler(config).await,
        Role::Worker => run_worker(config).await,
    }
}

enum Role {
    Scheduler,
    Worker,
}

/// `--role scheduler|worker`, no CLI-parsing crate involved - the teacher's
/// own binary reads configuration straight out of `std::env`, so this
/// follows the same convention for its one positional flag.
fn parse_role() -> anyhow::Result<Role> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--role" {
            let value = args
                .next()
                .ok_or_else(|| anyhow::anyhow!("--role requires a value"))?;
            return match value.as_str() {
                "scheduler" => Ok(Role::Scheduler),
                "worker" => Ok(Role::Worker),
                other => Err(anyhow::anyhow!(
                    "unknown --role '{other}', expected 'scheduler' or 'worker'"
                )),
            };
        }
    }
    Err(anyhow::anyhow!("usage: worker --role scheduler|worker"))
}

async fn run_scheduler(config: Config) -> anyhow::Result<()> {
    tracing::info!("starting scheduler role");

    let store = Arc::new(RedisScheduleStore::new(&config.redis_url)?);
    let stream = Arc::new(
        RedisTriggerStream::new(&config.redis_url, &config.trigger_consumer_group).await?,
    );
    let subscriber = ControlPlaneSubscriber::connect(&config.redis_url).await?;

    let mut registry = TriggerHandlerRegistry::new();
    registry.register(
        "scheduler",
        Arc::new(SchedulerTriggerHandler::new(store.clone())),
    );
    if let Some(public_url) = &config.webhook_public_url {
        let webhook = Arc::new(ReqwestWebhookHandler::new(public_url.clone()));
        let decryptor = Arc::new(AesGcmCredentialDecryptor::from_env()?);
        registry.register(
            "webhook-bot",
            Arc::new(WebhookBotTriggerHandler::new(
                webhook,
                decryptor,
                public_url.clone(),
            )),
        );
    } else {
        tracing::warn!("WEBHOOK_PUBLIC_URL not set; webhook-bot triggers are unavailable");
    }

    let runner = Arc::new(SchedulerRunner::new(store, stream, Arc::new(registry)));
    runner.run_forever(subscriber, DEFAULT_TICK_INTERVAL).await;
    Ok(())
}

async fn run_worker(config: Config) -> anyhow::Result<()> {
    tracing::info!("starting trigger worker role");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;

    let stream = Arc::new(
        RedisTriggerStream::new(&config.redis_url, &config.trigger_consumer_group).await?,
    );
    let repository = Arc::new(PgWorkflowRepository::new(pool.clone()));
    let executor = GraphExecutor::new(ActionRegistry::with_builtins())
        .with_parallelism(config.executor_parallelism);

    let credentials = AesGcmCredentialDecryptor::from_env().ok().map(|d| {
        Arc::new(d) as Arc<dyn core_node_engine::CredentialDecryptor>
    });
    let services = Arc::new(Services {
        db: Some(pool),
        credentials,
    });

    let consumer_name = std::env::var("HOSTNAME").unwrap_or_else(|_| "worker-1".to_string());
    let worker = Arc::new(TriggerWorker::new(
        stream,
        repository,
        executor,
        services,
        config.trigger_consumer_group,
        consumer_name,
    ));

    worker
        .run_forever(10, 5_000, DEFAULT_RECLAIM_INTERVAL, DEFAULT_IDLE_THRESHOLD)
        .await;
    Ok(())
}
