// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Asynchronous TCP client example

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use tokio_s7::prelude::*;

    let socket_addr = "192.168.0.1:102".parse()?;
    let config = Config::new(0, 2);

    let mut ctx = tcp::connect_with(socket_addr, config).await?;
    println!("Negotiated a PDU length of {} bytes", ctx.pdu_length());

    let info = ctx.get_cpu_info().await?;
    println!("Connected to {} ({})", info.module_type_name, info.serial_number);
    println!("Status: {:?}", ctx.get_status().await?);

    println!("Writing and reading back DB1.DBW0");
    ctx.write_db(1, 0, 2, &[0x12, 0x34]).await?;
    let mut buf = [0; 2];
    ctx.read_db(1, 0, 2, &mut buf).await?;
    println!("DB1.DBW0 = {:#06X}", u16::from_be_bytes(buf));

    let mut db = [0; 4];
    let mut merkers = [0; 1];
    let mut items = [
        ReadItem::new(DataItem::db_bytes(1, 0, 4), &mut db),
        ReadItem::new(DataItem::new(Area::Merkers, WordLen::Byte, 0, 10, 1), &mut merkers),
    ];
    for (i, result) in ctx.read_multi(&mut items).await?.iter().enumerate() {
        println!("Item {i}: {result:?}");
    }
    println!("DB1.DBD0 = {db:02X?}, MB10 = {merkers:02X?}");

    let blocks = ctx.list_blocks().await?;
    println!("Blocks: {blocks:?}");
    for number in ctx.list_blocks_of_type(BlockType::DB).await? {
        let block = ctx.get_block_info(BlockType::DB, number).await?;
        println!("DB{number}: {block:?}");
    }

    println!("Disconnecting");
    ctx.disconnect().await?;

    Ok(())
}
