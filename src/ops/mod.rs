pub mod export;
pub mod inpaint;
pub mod text;
