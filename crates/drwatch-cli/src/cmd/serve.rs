use drwatch_server::AppState;

use crate::setup::Setup;

pub fn run(setup: &Setup, port: u16) -> anyhow::Result<()> {
    let config = setup.load_config()?;
    for w in config.validate() {
        tracing::warn!("config: {}", w.message);
    }
    let db = setup.open_db()?;
    let ops = setup.remote_ops_for(&config, &db)?;
    let state = AppState::new(config, ops, db);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
        let actual_port = listener.local_addr()?.port();
        println!("drwatch → http://localhost:{actual_port}  (PID {})", std::process::id());

        tokio::select! {
            res = drwatch_server::serve_on(state, listener) => res,
            _ = tokio::signal::ctrl_c() => Ok(()),
        }
    })
}
