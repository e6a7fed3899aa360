use credential_core::{
    configuration::get_configuration,
    startup::Application,
    telemetry::{get_subscriber, init_subscriber},
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = get_subscriber("credential_core".into(), "info".into(), std::io::stdout);
    init_subscriber(subscriber);

    let settings = get_configuration().expect("Unable to read configuration files");
    let application = Application::build(&settings).await?;
    application.run_until_stopped().await?;
    Ok(())
}
