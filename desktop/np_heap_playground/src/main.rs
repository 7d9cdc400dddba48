/*
 *  Copyright (C) 2025  Markus Elias Gerber
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  You should have received a copy of the GNU General Public License
 *  along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use std::{sync::Arc, thread};

use env_logger::{Builder, Env};
use log::info;
use np_heap::{
    dispatch,
    modules::{address_space::SimulatedAddressSpace, memory_provider::MMapMemoryProvider},
    CallerId, NPConfig, NPHeap, NPHeapCmd, Operation,
};
use rand::{rngs::SmallRng, RngCore, SeedableRng};

type Heap = NPHeap<MMapMemoryProvider, SimulatedAddressSpace>;

const WORKERS: u32 = 4;
const ITERATIONS: u32 = 1000;
const OBJECTS: u64 = 4;
const MAPPING_BASE: usize = 0x4000_0000;

/// Issues `op` the same way a client process would: through a raw request payload
fn command(heap: &Heap, caller: CallerId, op: Operation, offset: u64) -> i64 {
    let payload = NPHeapCmd::new(offset, 0).to_bytes();
    dispatch(heap, caller, op.code(), &payload)
}

fn worker(heap: Arc<Heap>, caller: CallerId, seed: u64) {
    let page_size = heap.config().page_size as u64;
    let mut rand = SmallRng::seed_from_u64(seed);

    for _ in 0..ITERATIONS {
        let offset = (rand.next_u64() % OBJECTS) * page_size;

        assert_eq!(command(&heap, caller, Operation::Lock, offset), 0);

        let region = heap
            .map(caller, offset, MAPPING_BASE, page_size)
            .expect("mapping should succeed while holding the lock");

        let mut counter = [0u8; 8];
        unsafe {
            region.read_at(0, &mut counter);
            let value = u64::from_ne_bytes(counter) + 1;
            region.write_at(0, &value.to_ne_bytes());
        }
        drop(region);

        assert_eq!(command(&heap, caller, Operation::Unlock, offset), 0);
    }
}

fn main() {
    Builder::from_env(Env::default())
        .filter_level(log::LevelFilter::Info)
        .format_module_path(false)
        .init();

    let config = NPConfig::from_system();
    let heap: Arc<Heap> = Arc::new(NPHeap::new(
        config,
        MMapMemoryProvider::new(),
        SimulatedAddressSpace::new(config.page_size),
    ));

    let handles: Vec<_> = (0..WORKERS)
        .map(|i| {
            let heap = heap.clone();
            thread::spawn(move || worker(heap, CallerId(i + 1), 0x5eed + i as u64))
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let caller = CallerId::current_process();
    let page_size = config.page_size as u64;
    let mut total = 0;

    for object in 0..OBJECTS {
        let offset = object * page_size;
        let size = command(&heap, caller, Operation::GetSize, offset);
        if size <= 0 {
            info!("object {} was never mapped", object);
            continue;
        }

        assert_eq!(command(&heap, caller, Operation::Lock, offset), 0);
        let region = heap.map(caller, offset, MAPPING_BASE, page_size).unwrap();
        let mut counter = [0u8; 8];
        unsafe { region.read_at(0, &mut counter) };
        drop(region);

        let count = u64::from_ne_bytes(counter);
        info!("object {}: {} bytes, counter = {}", object, size, count);
        total += count;

        assert_eq!(command(&heap, caller, Operation::Delete, offset), 0);
        assert_eq!(command(&heap, caller, Operation::Unlock, offset), 0);
    }

    info!(
        "{} increments in total, expected {}",
        total,
        WORKERS as u64 * ITERATIONS as u64
    );
    assert_eq!(total, WORKERS as u64 * ITERATIONS as u64);
}
