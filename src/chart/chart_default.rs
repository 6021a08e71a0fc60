// Default chart bundled with the game.
// Times are seconds from song start; the pattern sweeps the lanes in both
// directions and then alternates pairs.
use super::{ChartNote, Lane as L};

const fn n(key: L, time: f64) -> ChartNote {
    ChartNote { key, time }
}

pub static DEFAULT_CHART: [ChartNote; 40] = [
    n(L::S, 1.00),
    n(L::D, 1.50),
    n(L::F, 2.00),
    n(L::J, 2.50),
    n(L::K, 3.00),
    n(L::L, 3.50),
    n(L::L, 4.00),
    n(L::K, 4.50),
    n(L::J, 5.50),
    n(L::F, 6.00),
    n(L::D, 6.50),
    n(L::S, 7.00),
    n(L::S, 7.50),
    n(L::L, 8.00),
    n(L::D, 8.50),
    n(L::K, 9.00),
    n(L::F, 10.00),
    n(L::J, 10.50),
    n(L::F, 11.00),
    n(L::J, 11.50),
    n(L::D, 12.00),
    n(L::K, 12.50),
    n(L::S, 13.00),
    n(L::L, 13.50),
    n(L::S, 14.50),
    n(L::F, 15.00),
    n(L::K, 15.50),
    n(L::D, 16.00),
    n(L::J, 16.50),
    n(L::L, 17.00),
    n(L::J, 17.50),
    n(L::D, 18.00),
    n(L::L, 19.00),
    n(L::F, 19.50),
    n(L::S, 20.00),
    n(L::K, 20.50),
    n(L::F, 21.00),
    n(L::F, 21.50),
    n(L::J, 22.00),
    n(L::J, 22.50),
];
