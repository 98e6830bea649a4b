//! Slippery grid world. The agent walks from the top left corner to the goal in the bottom
//! right corner; each move slips to one of the two perpendicular directions with probability
//! 1/3, and walking into a wall leaves the agent in place. Holes and the goal are absorbing.
use std::fmt;
use itertools::Itertools;
use crate::model_checking::mdp::MDP;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Move {
    Left,
    Down,
    Right,
    Up,
    /// Self loop of holes and the goal
    Done,
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Move::Left => "left",
            Move::Down => "down",
            Move::Right => "right",
            Move::Up => "up",
            Move::Done => "done",
        };
        write!(f, "{}", s)
    }
}

const MOVES: [Move; 4] = [Move::Left, Move::Down, Move::Right, Move::Up];

const HOLES_4X4: [usize; 4] = [5, 7, 11, 12];
const HOLES_8X8: [usize; 10] = [19, 29, 36, 41, 42, 46, 49, 52, 54, 59];

/// The moves an intended move may turn into
fn slips(m: Move) -> [Move; 3] {
    match m {
        Move::Left => [Move::Up, Move::Left, Move::Down],
        Move::Down => [Move::Left, Move::Down, Move::Right],
        Move::Right => [Move::Down, Move::Right, Move::Up],
        Move::Up => [Move::Right, Move::Up, Move::Left],
        Move::Done => [Move::Done, Move::Done, Move::Done],
    }
}

#[derive(Debug, Clone)]
pub struct FrozenLake {
    pub mdp: MDP<usize, Move>,
    pub size: usize,
    pub holes: Vec<usize>,
    pub start: usize,
    pub goal: usize,
}

impl FrozenLake {
    fn new(size: usize, holes: &[usize]) -> FrozenLake {
        let goal = size * size - 1;
        let mut mdp: MDP<usize, Move> = MDP::new();
        for s in 0..size * size {
            mdp.add_state(s);
        }
        for (row, col) in (0..size).cartesian_product(0..size) {
            let s = row * size + col;
            if s == goal || holes.contains(&s) {
                mdp.add_transition(&s, Move::Done, &s, 1.0, 0.0);
                continue;
            }
            for m in MOVES.iter() {
                for actual in slips(*m).iter() {
                    let (r, c) = step(row, col, *actual, size);
                    mdp.add_transition(&s, *m, &(r * size + c), 1.0 / 3.0, -1.0);
                }
            }
        }
        FrozenLake { mdp, size, holes: holes.to_vec(), start: 0, goal }
    }

    /// Renders a policy over the grid, one character per cell
    pub fn render(&self, policy: &std::collections::BTreeMap<usize, Move>) -> String {
        let mut out = String::new();
        for row in 0..self.size {
            for col in 0..self.size {
                let s = row * self.size + col;
                let c = if s == self.goal {
                    'G'
                } else if self.holes.contains(&s) {
                    'H'
                } else {
                    match policy.get(&s) {
                        Some(Move::Left) => '<',
                        Some(Move::Down) => 'v',
                        Some(Move::Right) => '>',
                        Some(Move::Up) => '^',
                        _ => '.',
                    }
                };
                out.push(c);
            }
            out.push('\n');
        }
        out
    }
}

fn step(row: usize, col: usize, m: Move, size: usize) -> (usize, usize) {
    match m {
        Move::Left => (row, col.saturating_sub(1)),
        Move::Down => ((row + 1).min(size - 1), col),
        Move::Right => (row, (col + 1).min(size - 1)),
        Move::Up => (row.saturating_sub(1), col),
        Move::Done => (row, col),
    }
}

/// The 4x4 lake, or the 8x8 one when `big` is set
pub fn frozen_lake(big: bool) -> FrozenLake {
    if big {
        FrozenLake::new(8, &HOLES_8X8)
    } else {
        FrozenLake::new(4, &HOLES_4X4)
    }
}
