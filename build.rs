// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

fn main() {
    println!(r#"cargo:rustc-check-cfg=cfg(timer_irq_has_nvic)"#);
    println!("cargo:rerun-if-changed=build.rs");

    let target = std::env::var("TARGET").unwrap_or_default();
    match target.as_str() {
        "thumbv6m-none-eabi"
        | "thumbv7m-none-eabi"
        | "thumbv7em-none-eabi"
        | "thumbv7em-none-eabihf"
        | "thumbv8m.base-none-eabi"
        | "thumbv8m.main-none-eabi"
        | "thumbv8m.main-none-eabihf" => {
            // Interrupt sources can be masked individually through the NVIC.
            println!("cargo:rustc-cfg=timer_irq_has_nvic");
        }
        _ => {
            // Hosted and non-ARM targets get the portable core only.
        }
    }
}
