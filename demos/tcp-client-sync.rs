// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Synchronous TCP client example

fn main() -> Result<(), Box<dyn std::error::Error>> {
    use tokio_s7::prelude::*;

    let socket_addr = "192.168.0.1:102".parse()?;
    let mut ctx = sync::tcp::connect_with(socket_addr, Config::new(0, 1))?;

    println!("Status: {:?}", ctx.get_status()?);

    let mut buf = [0; 8];
    ctx.read_area(DataItem::new(Area::Inputs, WordLen::Byte, 0, 0, 8), &mut buf)?;
    println!("IB0..IB7 = {buf:02X?}");

    ctx.disconnect()?;

    Ok(())
}
