mod conv;
mod pool;

use criterion::criterion_group;

criterion_group!(benches, pool::basic, conv::basic);
