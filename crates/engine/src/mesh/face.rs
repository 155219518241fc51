/// The six faces of a block. Discriminants are the atlas row of the face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Face {
    /// -Z
    Front = 0,
    /// +Z
    Back = 1,
    /// -X
    Left = 2,
    /// +X
    Right = 3,
    /// +Y
    Top = 4,
    /// -Y
    Bottom = 5,
}

pub const FACE_COUNT: usize = 6;

impl Face {
    pub const ALL: [Face; FACE_COUNT] = [
        Face::Front,
        Face::Back,
        Face::Left,
        Face::Right,
        Face::Top,
        Face::Bottom,
    ];

    /// Step from a block to the neighbour sharing this face.
    pub const fn offset(self) -> (i32, i32, i32) {
        match self {
            Face::Front => (0, 0, -1),
            Face::Back => (0, 0, 1),
            Face::Left => (-1, 0, 0),
            Face::Right => (1, 0, 0),
            Face::Top => (0, 1, 0),
            Face::Bottom => (0, -1, 0),
        }
    }

    pub const fn normal(self) -> [f32; 3] {
        let (x, y, z) = self.offset();
        [x as f32, y as f32, z as f32]
    }

    /// Quad corners relative to the block centre, counter-clockwise when
    /// seen from outside the block.
    pub const fn corners(self) -> [[f32; 3]; 4] {
        const H: f32 = 0.5;
        match self {
            Face::Front => [[-H, -H, -H], [-H, H, -H], [H, H, -H], [H, -H, -H]],
            Face::Back => [[H, -H, H], [H, H, H], [-H, H, H], [-H, -H, H]],
            Face::Left => [[-H, -H, H], [-H, H, H], [-H, H, -H], [-H, -H, -H]],
            Face::Right => [[H, -H, -H], [H, H, -H], [H, H, H], [H, -H, H]],
            Face::Top => [[-H, H, -H], [-H, H, H], [H, H, H], [H, H, -H]],
            Face::Bottom => [[-H, -H, H], [-H, -H, -H], [H, -H, -H], [H, -H, H]],
        }
    }
}

/// Cell-relative texture coordinates for each corner of [`Face::corners`].
pub const CORNER_UVS: [[f32; 2]; 4] = [[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0]];

/// Corner order of the two triangles of a quad.
pub const QUAD_TRIANGLES: [usize; 6] = [0, 1, 2, 0, 2, 3];
