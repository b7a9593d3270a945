// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sharing connections between tasks

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use tokio_s7::{
        client::{
            tcp::Endpoint,
            util::{reconnect_shared_context, Registry},
        },
        prelude::*,
    };

    let endpoint = Endpoint::new("192.168.0.1:102".parse()?, Config::new(0, 2));
    println!("Endpoint: {endpoint:?}");

    let registry = Registry::new();

    // Both tasks end up with the same connection
    let tasks = (0..2u32).map(|i| {
        let registry = registry.clone();
        let endpoint = endpoint.clone();
        tokio::spawn(async move {
            let shared_context = registry.get_or_connect(&endpoint).await?;
            let mut buf = [0; 2];
            shared_context
                .lock()
                .await
                .read_db(1, i * 2, 2, &mut buf)
                .await?;
            println!("Task {i}: DB1.DBW{} = {buf:02X?}", i * 2);
            Ok::<_, tokio_s7::Error>(())
        })
    });
    for task in tasks.collect::<Vec<_>>() {
        task.await??;
    }
    println!("{} connection(s) registered", registry.len());

    if let Some(shared_context) = registry.get(&endpoint.socket_addr) {
        println!("Reconnecting");
        reconnect_shared_context(&shared_context, &endpoint).await?;
        println!("Status: {:?}", shared_context.lock().await.get_status().await?);
    }

    Ok(())
}
