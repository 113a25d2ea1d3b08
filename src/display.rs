use anyhow::Result;
use crossterm::{
    cursor::MoveTo,
    style::{style, Attribute, Color, PrintStyledContent, Stylize},
    QueueableCommand,
};

use std::io::{stdout, Write};

use connect4_solver::{
    bitboard::{BitBoard, Player},
    HEIGHT, WIDTH,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GameState {
    Playing,
    Won(Player),
    Draw,
}

impl GameState {
    pub fn of(board: &BitBoard) -> Self {
        if board.is_aligned(Player::First) {
            GameState::Won(Player::First)
        } else if board.is_aligned(Player::Second) {
            GameState::Won(Player::Second)
        } else if board.legal_moves() == 0 {
            GameState::Draw
        } else {
            GameState::Playing
        }
    }
}

/// The 1-based player number shown to humans
pub fn player_number(player: Player) -> usize {
    player.index() + 1
}

/// Draws the board below the cursor, with the 0-indexed column numbers on top
pub fn display(board: &BitBoard) -> Result<()> {
    let mut stdout = stdout();

    let cols: String = (0..WIDTH).map(|x| x.to_string()).collect();
    stdout.queue(PrintStyledContent(style(cols + "\n")))?;
    for _ in 0..HEIGHT {
        stdout.queue(PrintStyledContent(style("\n")))?;
    }
    stdout.flush()?;

    let (origin_x, origin_y) = crossterm::cursor::position()?;

    for column in 0..WIDTH {
        for row in 0..HEIGHT {
            let cell = BitBoard::bottom_mask(column) << row;
            let (pos_x, pos_y) = (origin_x + column as u16, origin_y - 1 - row as u16);

            let colour = if board.stones(Player::First) & cell != 0 {
                Color::Red
            } else if board.stones(Player::Second) & cell != 0 {
                Color::Yellow
            } else {
                Color::DarkBlue
            };

            stdout
                .queue(MoveTo(pos_x, pos_y))?
                .queue(PrintStyledContent(
                    style("O")
                        .attribute(Attribute::Bold)
                        .on(Color::DarkBlue)
                        .with(colour),
                ))?;
        }
    }
    stdout
        .queue(MoveTo(origin_x, origin_y))?
        .queue(PrintStyledContent(style("\n")))?;
    stdout.flush()?;
    Ok(())
}
