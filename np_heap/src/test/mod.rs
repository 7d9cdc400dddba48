use crate::{
    modules::{address_space::SimulatedAddressSpace, memory_provider::HeapMemoryProvider},
    NPConfig, NPHeap,
};

mod rollback;
mod strict;

pub(crate) type TestHeap = NPHeap<HeapMemoryProvider, SimulatedAddressSpace>;

pub(crate) fn init_test_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default())
        .is_test(true)
        .try_init();
}

pub(crate) fn get_test_heap(config: NPConfig) -> TestHeap {
    get_test_heap_with_provider(config, HeapMemoryProvider::new())
}

pub(crate) fn get_test_heap_with_provider(
    config: NPConfig,
    provider: HeapMemoryProvider,
) -> TestHeap {
    init_test_logger();

    NPHeap::new(config, provider, SimulatedAddressSpace::new(config.page_size))
}
